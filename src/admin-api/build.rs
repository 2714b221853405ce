fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=proto");

    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .compile_protos(
            &["proto/google/bigtable/admin/v2/bigtable_table_admin.proto"],
            &["proto"],
        )?;

    Ok(())
}
