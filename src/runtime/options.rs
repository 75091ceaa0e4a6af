//! Command line generation for `docker run`.
//!
//! These are plain string builders; the assembled command line is split with
//! shell-word rules before execution, never handed to a shell.

use crate::descriptor::{NodeDescriptor, VolumeSpec};

/// Options every container gets.
///
/// No runtime-managed networking: interfaces are wired afterwards. `DOCKER_FIX`
/// works around docker/docker#14203.
pub const BASE_RUN_OPTS: &str = concat!(
    r#"--net="none" "#,
    "-v /root/.ssh/authorized_keys:/root/.ssh/authorized_keys ",
    r#"-t -e DOCKER_FIX="""#
);

/// One `-v origin:destination:mode ` token per volume, in order
pub fn generate_volume_opts(volumes: &[VolumeSpec]) -> String {
    volumes
        .iter()
        .map(|v| format!("-v {}:{}:{} ", v.origin, v.destination, v.mode))
        .collect()
}

/// Base options, then extra options, then `-d` when running detached
pub fn generate_run_opts(extra_opts: &str, daemon: bool) -> String {
    let mut opts = format!("{} {} ", BASE_RUN_OPTS, extra_opts);
    if daemon {
        opts.push_str("-d ");
    }
    opts
}

/// CPU quota (cores × period) and memory limit in MB
pub fn generate_resource_limits(cpu: u32, mem_mb: u64, cpu_period: u64) -> String {
    format!(
        " --cpu-quota={} --cpu-period={} --memory={}m",
        u64::from(cpu) * cpu_period,
        cpu_period,
        mem_mb
    )
}

/// Full `run` argument line (without the runtime binary)
pub fn run_command_line(descriptor: &NodeDescriptor, daemon: bool, cpu_period: u64) -> String {
    format!(
        "run {limits} {opts} {volumes} -h {hostname} --name {name} {image}",
        limits = generate_resource_limits(descriptor.cpu, descriptor.mem_mb, cpu_period),
        opts = generate_run_opts(&descriptor.extra_options, daemon),
        volumes = generate_volume_opts(&descriptor.volumes),
        hostname = descriptor.node_name,
        name = descriptor.container_name(),
        image = descriptor.image,
    )
}
