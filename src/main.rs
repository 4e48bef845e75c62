fn main() {
    hyperspec_pipeline::cli::run();
}
