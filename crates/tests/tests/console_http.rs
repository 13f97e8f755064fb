mod support;

use anyhow::Result;
use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use repo_console::config::{ConsoleConfig, IdentityConfig, IdentitySource};
use repo_console::model::{Dependency, Package, PackageVersion};
use repo_console::{EntityStoreExt, Kind};
use serde_json::{Value, json};

use support::{ADMIN, Console, USER, request};

fn seed_curl(console: &Console) -> Result<()> {
    console.store.save(&mut Package {
        title: "curl".into(),
        url: "https://curl.se".into(),
        ..Package::named("curl")
    })?;
    let mut version = PackageVersion::new("curl", "8.4.0");
    version.url = "https://curl.se/download/curl-8.4.0.zip".into();
    version.dependencies = vec![Dependency {
        package: "vcredist".into(),
        versions: "[14, 15)".into(),
        env_var: "VCREDIST".into(),
    }];
    console.store.save(&mut version)?;
    Ok(())
}

#[tokio::test]
async fn package_writes_require_administrator() -> Result<()> {
    let console = Console::with_defaults()?;
    for user in [None, Some(USER)] {
        let reply = console.post("/p/save", user, "name=foo&title=Foo").await?;
        assert_eq!(reply.status, StatusCode::FORBIDDEN);
        assert!(reply.body.contains("Error 403"));
        let reply = console.post("/p/delete", user, "name=foo").await?;
        assert_eq!(reply.status, StatusCode::FORBIDDEN);
    }
    assert_eq!(console.store.list(Kind::Package)?.len(), 0);
    Ok(())
}

#[tokio::test]
async fn admin_save_redirects_to_listing() -> Result<()> {
    let console = Console::with_defaults()?;
    let reply = console
        .post("/p/save", Some(ADMIN), "id=&name=foo&title=Foo+Tool&url=https%3A%2F%2Ffoo.example")
        .await?;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location(), Some("/p"));
    assert!(reply.body.is_empty());

    let listing = console.get("/p", None).await?;
    assert_eq!(listing.status, StatusCode::OK);
    assert_eq!(listing.content_type(), Some("text/html; charset=utf-8"));
    assert!(listing.body.contains("Foo Tool"));
    assert!(listing.body.contains("https://foo.example"));
    Ok(())
}

#[tokio::test]
async fn admin_edit_keeps_untouched_fields() -> Result<()> {
    let console = Console::with_defaults()?;
    let mut nameless = Package {
        title: "Draft".into(),
        description: "keep this".into(),
        ..Package::default()
    };
    let key = console.store.save(&mut nameless)?;
    let id = key.id().unwrap_or_default();

    let reply = console
        .post("/p/save", Some(ADMIN), &format!("id={id}&title=Final"))
        .await?;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);

    let saved: Package = console.store.load(&key)?.expect("package still stored");
    assert_eq!(saved.title, "Final");
    assert_eq!(saved.description, "keep this");
    Ok(())
}

#[tokio::test]
async fn admin_edits_named_package_by_key() -> Result<()> {
    let console = Console::with_defaults()?;
    seed_curl(&console)?;

    let reply = console
        .post("/p/save", Some(ADMIN), "key=curl&title=cURL&description=Transfers+data")
        .await?;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    let saved: Package = console
        .store
        .load(&Package::key_for("curl"))?
        .expect("package still stored");
    assert_eq!(saved.title, "cURL");
    assert_eq!(saved.description, "Transfers data");
    assert_eq!(saved.url, "https://curl.se");

    let rename = console.post("/p/save", Some(ADMIN), "key=curl&name=wget").await?;
    assert_eq!(rename.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn package_names_stay_unique_across_key_styles() -> Result<()> {
    let console = Console::with_defaults()?;
    seed_curl(&console)?;
    console.post("/p/save", Some(ADMIN), "title=Nameless").await?;

    let clash = console.post("/p/save", Some(ADMIN), "id=1&name=curl").await?;
    assert_eq!(clash.status, StatusCode::BAD_REQUEST);

    let renamed = console.post("/p/save", Some(ADMIN), "id=1&name=wget").await?;
    assert_eq!(renamed.status, StatusCode::SEE_OTHER);
    let version = console
        .post("/package-version/save", Some(USER), "package=wget&version=1.21")
        .await?;
    assert_eq!(version.status, StatusCode::SEE_OTHER);

    let deleted = console.post("/p/delete", Some(ADMIN), "id=1").await?;
    assert_eq!(deleted.status, StatusCode::SEE_OTHER);
    let remaining = console.store.load_all::<PackageVersion>()?;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].package, "curl");
    Ok(())
}

#[tokio::test]
async fn malformed_and_unknown_ids_map_to_statuses() -> Result<()> {
    let console = Console::with_defaults()?;
    let reply = console.post("/p/save", Some(ADMIN), "id=abc").await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    let reply = console.post("/p/save", Some(ADMIN), "id=77").await?;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn unknown_paths_are_not_found() -> Result<()> {
    let console = Console::with_defaults()?;
    for path in ["/", "/p/", "/p/save/extra", "/package-version"] {
        let reply = console.get(path, Some(ADMIN)).await?;
        assert_eq!(reply.status, StatusCode::NOT_FOUND, "{path}");
        assert!(reply.body.contains("Error 404"));
    }
    Ok(())
}

#[tokio::test]
async fn pages_carry_exactly_one_footer() -> Result<()> {
    let console = Console::with_defaults()?;
    let anonymous = console.get("/p", None).await?;
    assert!(anonymous.body.contains("/_auth/login?continue"));
    assert!(!anonymous.body.contains("/_auth/logout"));

    let signed_in = console.get("/p", Some(USER)).await?;
    assert!(signed_in.body.contains(USER));
    assert!(signed_in.body.contains("/_auth/logout?continue"));
    assert!(!signed_in.body.contains("/_auth/login"));
    Ok(())
}

#[tokio::test]
async fn copy_renders_prefilled_form_without_writing() -> Result<()> {
    let console = Console::with_defaults()?;
    seed_curl(&console)?;

    let reply = console
        .post("/package-version/copy", None, "name=curl%408.4.0")
        .await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.contains("https://curl.se/download/curl-8.4.0.zip"));
    assert!(reply.body.contains("name=\"depPackage.0\" value=\"vcredist\""));
    assert_eq!(console.store.list(Kind::PackageVersion)?.len(), 1);

    let missing = console
        .post("/package-version/copy", None, "name=curl%400.0.1")
        .await?;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(console.store.list(Kind::PackageVersion)?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn confirmed_copy_is_saved_by_signed_in_user() -> Result<()> {
    let console = Console::with_defaults()?;
    seed_curl(&console)?;
    let form = "package=curl&version=8.5.0&url=https%3A%2F%2Fcurl.se%2Fcurl-8.5.0.zip\
                &tags=network%2Chttp&depPackage.0=vcredist&depVersions.0=%5B14%2C+15%29";

    let anonymous = console.post("/package-version/save", None, form).await?;
    assert_eq!(anonymous.status, StatusCode::FORBIDDEN);

    let reply = console.post("/package-version/save", Some(USER), form).await?;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    let saved: PackageVersion = console
        .store
        .load(&PackageVersion::key_for("curl", "8.5.0"))?
        .expect("copy persisted");
    assert_eq!(saved.tags, vec!["network".to_string(), "http".to_string()]);
    assert_eq!(saved.dependencies[0].versions, "[14, 15)");

    let again = console.post("/package-version/save", Some(USER), form).await?;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn delete_accepts_query_parameters() -> Result<()> {
    let console = Console::with_defaults()?;
    seed_curl(&console)?;
    let reply = console.get("/p/delete?name=curl", Some(ADMIN)).await?;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(console.store.list(Kind::Package)?.len(), 0);
    assert_eq!(console.store.list(Kind::PackageVersion)?.len(), 0);
    Ok(())
}

#[tokio::test]
async fn jwt_admin_claim_grants_administrator() -> Result<()> {
    let console = Console::start(ConsoleConfig {
        identity: IdentityConfig {
            source: IdentitySource::Jwt,
            ..IdentityConfig::default()
        },
        ..ConsoleConfig::default()
    })?;
    let token = |claims: Value| {
        format!(
            "Bearer {}.{}.signature",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        )
    };

    let mut save = request("POST", "/p/save", None, Some("name=jq"))?;
    save.headers_mut().insert(
        "authorization",
        token(json!({ "email": "ops@example.com", "admin": true })).parse()?,
    );
    assert_eq!(console.send(save).await?.status, StatusCode::SEE_OTHER);

    let mut save = request("POST", "/p/save", None, Some("name=yq"))?;
    save.headers_mut().insert(
        "authorization",
        token(json!({ "email": "dev@example.com" })).parse()?,
    );
    assert_eq!(console.send(save).await?.status, StatusCode::FORBIDDEN);
    assert_eq!(console.store.list(Kind::Package)?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn healthz_reports_routes_and_version() -> Result<()> {
    let console = Console::with_defaults()?;
    console.get("/nowhere", None).await?;
    let reply = console.get("/healthz", None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    let body: Value = serde_json::from_str(&reply.body)?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["routes"], 5);
    assert_eq!(body["failures"], 0);
    assert!(body["version"].as_str().is_some());
    assert!(body["started_at"].as_str().is_some());
    Ok(())
}
