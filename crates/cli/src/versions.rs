use console::style;
use multistripe_driver_stripe::RELEASES;

use crate::Context;

#[derive(Debug, Clone, PartialEq, clap::Args)]
pub struct VersionsCommand {}

/// One line per supported release: key, pinned API version, enabled marker
pub fn version_lines(ctx: &Context) -> Vec<(&'static str, &'static str, bool)> {
    RELEASES
        .iter()
        .map(|(key, api_version)| (*key, *api_version, ctx.manifest.is_enabled(key)))
        .collect()
}

impl VersionsCommand {
    pub fn execute(&self, ctx: &Context) {
        for (key, api_version, enabled) in version_lines(ctx) {
            let marker = if enabled {
                style("✓").green()
            } else {
                style("-").dim()
            };
            println!("{} {} {}", marker, style(key).bold(), style(api_version).dim());
        }
    }
}
