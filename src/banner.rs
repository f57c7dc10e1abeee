//! The startup summary printed in verbose mode. Every metric degrades to a
//! placeholder instead of failing; the banner never blocks startup.

use crate::console;
use comfy_table::{Attribute, Cell, Color, Table, presets::UTF8_FULL_CONDENSED};
use sysinfo::{Networks, System};

const PLACEHOLDER: &str = "-";

#[derive(Debug, Clone, PartialEq)]
pub struct SystemSnapshot {
    pub user: String,
    pub platform: String,
    pub cpus: Vec<String>,
    pub interfaces: Vec<String>,
    pub memory: String,
}

pub fn collect() -> SystemSnapshot {
    let mut sys = System::new();
    sys.refresh_cpu_all();
    sys.refresh_memory();

    let cpus = sys
        .cpus()
        .iter()
        .enumerate()
        .map(|(i, cpu)| format!("{}. {} {} MHz", i + 1, cpu.brand(), cpu.frequency()))
        .collect();

    SystemSnapshot {
        user: current_user(),
        platform: format!(
            "{} {} {}",
            System::name().unwrap_or_else(|| PLACEHOLDER.to_string()),
            std::env::consts::ARCH,
            System::kernel_version().unwrap_or_else(|| PLACEHOLDER.to_string())
        ),
        cpus,
        interfaces: network_interfaces(),
        memory: format_memory(sys.free_memory(), sys.total_memory()),
    }
}

fn current_user() -> String {
    let uid = nix::unistd::getuid();
    let name = match nix::unistd::User::from_uid(uid) {
        Ok(Some(user)) => user.name,
        _ => PLACEHOLDER.to_string(),
    };
    format!("({uid}) {name}")
}

fn network_interfaces() -> Vec<String> {
    let networks = Networks::new_with_refreshed_list();
    let mut lines: Vec<String> = networks
        .iter()
        .map(|(name, data)| {
            let addrs: Vec<String> = data
                .ip_networks()
                .iter()
                .map(|net| {
                    let family = if net.addr.is_ipv4() { "IPv4" } else { "IPv6" };
                    format!("{family} - {}", net.addr)
                })
                .collect();
            if addrs.is_empty() {
                format!("{name}: {PLACEHOLDER}")
            } else {
                format!("{name}: {}", addrs.join("     "))
            }
        })
        .collect();
    lines.sort();
    lines
}

/// `Free 25.00% (1024.00 MB / 4096.00 MB)`, or the placeholder when the
/// total is unknown.
pub fn format_memory(free_bytes: u64, total_bytes: u64) -> String {
    if total_bytes == 0 {
        return PLACEHOLDER.to_string();
    }
    let mb = |bytes: u64| bytes as f64 / (1024.0 * 1024.0);
    let percent = free_bytes as f64 / total_bytes as f64 * 100.0;
    format!(
        "Free {percent:.2}% ({:.2} MB / {:.2} MB)",
        mb(free_bytes),
        mb(total_bytes)
    )
}

fn joined_or_placeholder(lines: &[String]) -> String {
    if lines.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        lines.join("\n")
    }
}

pub fn render(snapshot: &SystemSnapshot) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    let rows = [
        ("User", snapshot.user.clone()),
        ("Running on", snapshot.platform.clone()),
        ("CPU's", joined_or_placeholder(&snapshot.cpus)),
        ("Net Interfaces", joined_or_placeholder(&snapshot.interfaces)),
        ("Memory", snapshot.memory.clone()),
    ];
    for (name, value) in rows {
        table.add_row(vec![
            Cell::new(name).fg(Color::Blue).add_attribute(Attribute::Bold),
            Cell::new(value).fg(Color::Green),
        ]);
    }
    table.to_string()
}

pub fn print() {
    println!("{}", console::heading("System"));
    println!("{}", render(&collect()));
    println!();
}
