fn main() {
    for (var, key) in [("TARGET", "PAIRLINK_BUILD_TARGET"), ("PROFILE", "PAIRLINK_BUILD_PROFILE")] {
        println!("cargo:rerun-if-env-changed={var}");
        if let Ok(value) = std::env::var(var) {
            println!("cargo:rustc-env={key}={value}");
        }
    }
}
