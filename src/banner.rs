//! Startup banner.

/// Connection summary for the startup banner.
pub struct BannerInfo<'a> {
    pub worker_id: &'a str,
    pub address: &'a str,
    pub topics: &'a [String],
    pub max_tasks: usize,
}

/// Print the startup banner with connection info.
pub fn print_banner(info: &BannerInfo) {
    println!(
        r#"
   ╔═══════════════════════════════════════╗
   ║            C O U R I E R              ║
   ║    fetches tasks, delivers results    ║
   ╚═══════════════════════════════════════╝

   version   {}
   worker    {}
   broker    {}
   topics    {}
   batch     {} task(s) per poll
"#,
        env!("CARGO_PKG_VERSION"),
        info.worker_id,
        info.address,
        info.topics.join(", "),
        info.max_tasks,
    );
}
