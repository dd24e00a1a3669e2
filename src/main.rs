use anyhow::Result;
use clap::Parser;

use winit::dpi::LogicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Fullscreen, WindowBuilder};

use tinyrhi::app::{App, Settings};

#[derive(Parser, Debug)]
#[command(name = "triangle")]
#[command(about = "Draws a triangle after a full Vulkan bring-up")]
struct Args {
    /// force v-sync (FIFO presentation)
    #[arg(long)]
    vsync: bool,

    /// borderless fullscreen instead of a window
    #[arg(long)]
    fullscreen: bool,

    /// disable the validation layer even in debug builds
    #[arg(long)]
    no_validation: bool,

    /// window width in logical pixels
    #[arg(long, default_value_t = 1024)]
    width: u32,

    /// window height in logical pixels
    #[arg(long, default_value_t = 768)]
    height: u32,
}

fn main() -> Result<()> {
    let args = Args::parse();

    dotenv::dotenv().ok();
    pretty_env_logger::init();

    let settings = Settings {
        validation: !args.no_validation && cfg!(debug_assertions),
        vsync: args.vsync,
        fullscreen: args.fullscreen,
    };

    // Create window
    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title("Vulkan Example")
        // the logical size will be dpi-scaled
        .with_inner_size(LogicalSize::new(args.width, args.height))
        .with_fullscreen(settings.fullscreen.then(|| Fullscreen::Borderless(None)))
        .build(&event_loop)?;

    let mut app = unsafe { App::create(&window, settings)? };
    let mut destroying = false;
    let mut minimized = false;
    event_loop.run(move |event, _, control_flow| {
        // poll for events, even if none is available
        *control_flow = ControlFlow::Poll;

        match event {
            // render a new frame once all other events have been cleared;
            // a minimized window has a zero-sized surface, nothing to do
            Event::MainEventsCleared if !destroying && !minimized => {
                unsafe { app.render(&window) }.unwrap()
            }
            // remember resizes; the swapchain is recreated after the next
            // present rather than once per resize event
            Event::WindowEvent {
                event: WindowEvent::Resized(size),
                ..
            } => {
                if size.width == 0 || size.height == 0 {
                    minimized = true;
                } else {
                    minimized = false;
                    app.resized = true;
                }
            }
            // emitted when the OS asks the window to close
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                ..
            } => {
                destroying = true;
                *control_flow = ControlFlow::Exit;
                unsafe {
                    app.destroy();
                }
            }
            _ => {}
        }
    });
}
