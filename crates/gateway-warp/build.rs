fn main() {
    prost_build::compile_protos(&["proto/warp.proto"], &["proto/"]).expect("failed to compile warp.proto");
    println!("cargo:rerun-if-changed=proto/warp.proto");
}
