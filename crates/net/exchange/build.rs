use std::path::{Path, PathBuf};

use pb_rs::{ConfigBuilder, types::FileDescriptor};
use walkdir::WalkDir;

fn main() {
    let out_dir = std::env::var("OUT_DIR").unwrap();
    let out_dir = Path::new(&out_dir).join("proto");

    let in_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap()).join("proto");
    println!("cargo:rerun-if-changed={}", in_dir.display());

    let proto_ext = Some(Path::new("proto").as_os_str());
    let mut protos = Vec::new();
    for entry in WalkDir::new(&in_dir) {
        let path = entry.unwrap().into_path();
        if path.extension() == proto_ext {
            println!("cargo:rerun-if-changed={}", path.display());
            protos.push(path);
        }
    }

    if out_dir.exists() {
        std::fs::remove_dir_all(&out_dir).unwrap();
    }
    std::fs::DirBuilder::new().create(&out_dir).unwrap();

    let config_builder = ConfigBuilder::new(&protos, None, Some(&out_dir), &[in_dir])
        .unwrap()
        .dont_use_cow(true);
    FileDescriptor::run(&config_builder.build()).unwrap()
}
