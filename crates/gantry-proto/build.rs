fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Ensure a `protoc` is available without relying on a system install.
    if std::env::var_os("PROTOC").is_none() {
        if let Ok(path) = protoc_bin_vendored::protoc_bin_path() {
            std::env::set_var("PROTOC", path);
        }
    }
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/operator.proto"], &["proto"])?;
    println!("cargo:rerun-if-changed=proto/operator.proto");
    Ok(())
}
