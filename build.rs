use std::env;
use std::fs;
use std::path::{Path, PathBuf};

// compile every shader under shaders/ into OUT_DIR, so the pipeline can
// embed the SPIR-V with include_bytes! without committing binaries
fn main() {
    let out = PathBuf::from(env::var("OUT_DIR").unwrap());
    let compiler = shaderc::Compiler::new().unwrap();

    let mut options = shaderc::CompileOptions::new().unwrap();
    options.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );

    compile(&compiler, &options, &out, "shaders/shader.vert", "vert.spv");
    compile(&compiler, &options, &out, "shaders/shader.frag", "frag.spv");

    println!("cargo:rerun-if-changed=shaders/shader.vert");
    println!("cargo:rerun-if-changed=shaders/shader.frag");
}

fn compile(
    compiler: &shaderc::Compiler,
    options: &shaderc::CompileOptions,
    out: &Path,
    source_path: &str,
    spv_name: &str,
) {
    let source = fs::read_to_string(source_path).unwrap();

    let kind = if source_path.ends_with(".vert") {
        shaderc::ShaderKind::Vertex
    } else {
        shaderc::ShaderKind::Fragment
    };

    let spirv = compiler
        .compile_into_spirv(&source, kind, source_path, "main", Some(options))
        .unwrap();

    fs::write(out.join(spv_name), spirv.as_binary_u8()).unwrap();
}
