pub fn print_banner() {
    let banner = r#"
                      _  __ _
  ___ __ _ _ __  ___(_)/ _| |_
 / __/ _` | '_ \/ __| | |_| __|
| (_| (_| | |_) \__ \ |  _| |_
 \___\__,_| .__/|___/_|_|  \__|
          |_|
"#;
    println!("{}", console::style(banner).cyan());
    println!(
        "  {} v{}  offline packet-capture triage\n",
        console::style("capsift").cyan().bold(),
        capsift_core::VERSION,
    );
}
