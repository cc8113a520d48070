fn main() -> std::process::ExitCode {
    kpi_scorecard_lib::run()
}
