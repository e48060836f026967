//! Compiles the jump-buffer trampoline.
//!
//! The non-local return out of a trap handler has to land in a frame that
//! owns the `sigsetjmp`/`setjmp` buffer. Rust has no returns-twice support,
//! so that frame lives in a few lines of C.

fn main() {
    println!("cargo:rerun-if-changed=src/trampoline.c");

    cc::Build::new()
        .file("src/trampoline.c")
        .warnings(true)
        .compile("relive_guard_trampoline");
}
