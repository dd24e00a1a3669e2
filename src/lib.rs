//! A minimal Vulkan RHI: instance, device and swapchain bring-up plus just
//! enough pipeline machinery to put a triangle on screen.
//!
//! The modules under [`render`] each own one stage of the bring-up sequence;
//! [`app`] wires them together in the order the Vulkan specification
//! requires and drives the draw loop.

pub mod app;
pub mod render;
