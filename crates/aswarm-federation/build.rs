use std::io::Result;

fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=proto/");
    println!("cargo:rerun-if-env-changed=PROTOC");

    // Use the system protoc when PROTOC is set, the vendored binary otherwise
    if std::env::var_os("PROTOC").is_none() {
        let protoc = protoc_bin_vendored::protoc_bin_path()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()))?;
        std::env::set_var("PROTOC", protoc);
    }

    prost_build::Config::new().compile_protos(&["proto/federation.proto"], &["proto/"])?;
    Ok(())
}
