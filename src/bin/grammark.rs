fn main() {
    grammark::cli::run();
}
