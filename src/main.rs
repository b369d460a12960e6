fn main() {
    rapport::cli::main();
}
