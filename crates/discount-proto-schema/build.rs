fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_prost_build::compile_protos("proto/discount/v1/discount.proto")?;
    Ok(())
}
