fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The gateway only calls the namespace service
    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .compile_protos(&["proto/Rpc.proto"], &["proto"])?;

    Ok(())
}
