//! Terminal and execution-context detection

/// Check if stderr is attached to a terminal
pub fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// True when running without an interactive terminal (CI, daemons, test harnesses)
pub fn is_headless() -> bool {
    !is_tty()
}
