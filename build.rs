fn main() {
    // Only the firmware image needs the ESP-IDF environment; host builds
    // (tests, fuzzing) compile without the `espidf` feature.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
