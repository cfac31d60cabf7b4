//! Info command

use anyhow::Result;
use crossterm::style::Stylize;
use prebuilt_schema::PlatformKey;

use crate::Settings;
use crate::ui::Theme;

/// Show package metadata, releases and artifacts, marking the host's entry
pub async fn info(settings: &Settings) -> Result<()> {
    let file = super::load_catalog(&settings.catalog).await?;
    let host = PlatformKey::detect().ok();
    let theme = Theme::default();
    let default = file.release(None)?;
    let package = default.package();

    let lw = 12;

    println!();
    println!(
        "  {} {}",
        package.name.as_str().with(theme.colors.package_name).bold(),
        file.default_version().with(theme.colors.secondary)
    );
    if !package.description.is_empty() {
        println!("  {}", package.description);
    }
    println!();
    if !package.homepage.is_empty() {
        println!("  {:<lw$}{}", "homepage", package.homepage);
    }
    println!("  {:<lw$}{}", "binary", package.binary_name());
    println!("  {:<lw$}{}", "smoke test", package.smoke_args.join(" "));
    println!(
        "  {:<lw$}{}",
        "host",
        host.map_or_else(|| "unsupported".to_string(), |h| h.to_string())
    );

    for release in file.releases() {
        println!();
        let marker = if release.version() == file.default_version() {
            " (default)"
        } else {
            ""
        };
        println!(
            "  {}{}",
            release.version().with(theme.colors.version).bold(),
            marker.with(theme.colors.secondary)
        );

        for entry in release.entries() {
            let is_host = host == Some(entry.platform);
            let icon = if is_host {
                theme.icons.success.with(theme.colors.success)
            } else {
                theme.icons.active.with(theme.colors.secondary)
            };
            println!(
                "    {icon} {:<14} {:<8} {}  {}{}",
                entry.platform.to_string(),
                entry.format.to_string(),
                entry.expected_digest.short().with(theme.colors.secondary),
                entry.location,
                if is_host { "  <- this host" } else { "" }
            );
        }
    }

    Ok(())
}
