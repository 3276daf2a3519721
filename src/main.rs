fn main() {
    std::process::exit(devicebar_lib::run());
}
