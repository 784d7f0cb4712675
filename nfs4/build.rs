fn main() {
    xdr_codegen::Compiler::new()
        .file("input/nfs4_prot.x")
        .run()
        .expect("failed to generate NFSv4 COMPOUND bindings");
}
