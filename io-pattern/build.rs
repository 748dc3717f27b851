use std::{env, path::PathBuf, process::Command};

fn main() {
    // Rebuild if BPF crate changes
    println!("cargo:rerun-if-changed=../io-pattern-ebpf/src");
    println!("cargo:rerun-if-changed=../io-pattern-ebpf/Cargo.toml");

    if env::var_os("CARGO_FEATURE_EBPF").is_none() {
        return;
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let target_dir = out_dir.join("ebpf-target");

    // Build io-pattern-ebpf for bpf target
    let status = Command::new("cargo")
        .current_dir("../io-pattern-ebpf")
        .env_remove("RUSTC")
        .env_remove("RUSTC_WORKSPACE_WRAPPER")
        .env_remove("CARGO_ENCODED_RUSTFLAGS")
        .args([
            "+nightly",
            "build",
            "--release",
            "--target",
            "bpfel-unknown-none",
            "-Z",
            "build-std=core",
            "--target-dir",
        ])
        .arg(&target_dir)
        .status()
        .expect("failed to run cargo build for eBPF");

    if !status.success() {
        panic!("eBPF build failed");
    }

    let bpf_src = target_dir.join("bpfel-unknown-none/release/io-pattern-ebpf");
    let bpf_dst = out_dir.join("io-pattern-ebpf.o");

    std::fs::copy(&bpf_src, &bpf_dst).expect("Failed to copy BPF object");

    println!(
        "cargo:rustc-env=IO_PATTERN_EBPF_PATH={}",
        bpf_dst.to_string_lossy()
    );
}
