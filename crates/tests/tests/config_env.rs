mod support;

use std::fs;

use anyhow::Result;
use axum::http::StatusCode;
use repo_console::config::{ConsoleConfig, IdentitySource};
use serial_test::serial;
use tempfile::TempDir;

use support::{Console, EnvGuard};

fn write_config(dir: &TempDir, body: &str) -> Result<std::path::PathBuf> {
    let path = dir.path().join("console.yaml");
    fs::write(&path, body)?;
    Ok(path)
}

#[test]
#[serial]
fn environment_overrides_file_values() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_config(
        &dir,
        "port: 9000\nidentity:\n  source: header\n  admins: [file@example.com]\n",
    )?;
    let _port = EnvGuard::set("CONSOLE_PORT", "9100");
    let _admins = EnvGuard::set("CONSOLE_ADMINS", "a@example.com, ,b@example.com");
    let _identity = EnvGuard::set("CONSOLE_IDENTITY", "jwt");

    let config = ConsoleConfig::load_from_path(&path)?.apply_env()?;
    assert_eq!(config.port, 9100);
    assert_eq!(config.identity.source, IdentitySource::Jwt);
    assert_eq!(
        config.identity.admins,
        vec!["a@example.com".to_string(), "b@example.com".to_string()]
    );
    Ok(())
}

#[test]
#[serial]
fn invalid_environment_values_fail() -> Result<()> {
    {
        let _port = EnvGuard::set("CONSOLE_PORT", "eighty");
        assert!(ConsoleConfig::default().apply_env().is_err());
    }
    let _identity = EnvGuard::set("CONSOLE_IDENTITY", "kerberos");
    assert!(ConsoleConfig::default().apply_env().is_err());
    Ok(())
}

#[tokio::test]
#[serial]
async fn template_directory_overrides_builtins() -> Result<()> {
    let dir = TempDir::new()?;
    fs::create_dir_all(dir.path().join("templates/basic"))?;
    fs::write(
        dir.path().join("templates/PackageList.html"),
        "custom listing: {{count}} {{{footer}}}",
    )?;
    fs::write(
        dir.path().join("templates/basic/LoginFooter.html"),
        "[login]",
    )?;
    let path = write_config(&dir, "templates_dir: templates\n")?;

    let config = ConsoleConfig::load_from_path(&path)?;
    let console = Console::start(config)?;
    let reply = console.get("/p", None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, "custom listing: 0 [login]");
    Ok(())
}

#[tokio::test]
#[serial]
async fn templates_dir_from_environment_is_used() -> Result<()> {
    let dir = TempDir::new()?;
    fs::write(dir.path().join("Error.html"), "oops {{status}}")?;
    let _templates = EnvGuard::set("CONSOLE_TEMPLATES_DIR", dir.path().to_string_lossy());

    let config = ConsoleConfig::default().apply_env()?;
    let console = Console::start(config)?;
    let reply = console.get("/missing", None).await?;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body, "oops 404");
    Ok(())
}
