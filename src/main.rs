fn main() {
    sable::cli::run();
}
