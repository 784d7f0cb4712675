fn main() {
    xdr_codegen::Compiler::new()
        .file("input/rpc_prot.x")
        .run()
        .expect("failed to generate ONC RPC bindings");
}
