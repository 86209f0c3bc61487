//! Mirror a Hearty Rabbit account into a local directory tree.
//!
//! Logs in, enumerates the account's collections and downloads every member
//! blob into `<dir>/<collection>/`, one directory level per collection
//! segment. Files that already exist with content are left alone, so reruns
//! only fetch what is missing.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use hrb_client::{Blob, Config, Permission, Session};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "hrb-sync")]
#[command(about = "Mirror a Hearty Rabbit account into a local directory tree")]
#[command(version)]
struct Args {
    /// Server host and port, e.g. hrb.example.com:4433
    site: String,

    /// Destination directory
    dir: PathBuf,

    /// User to log in as
    #[arg(short, long, env = "HRB_USER")]
    user: String,

    /// Password
    #[arg(short, long, env = "HRB_PASSWORD", hide_env_values = true)]
    password: String,

    /// Rendition to download
    #[arg(long, default_value = "master")]
    rendition: String,

    /// Trust this root certificate (PEM)
    #[arg(long)]
    cert: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug {
        "hrb_sync=debug,hrb_client=debug"
    } else {
        "hrb_sync=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::new(format!("https://{}", args.site));
    if let Some(cert) = &args.cert {
        config = config.with_root_cert(cert);
    }

    let mut session = Session::new(config)?;
    session
        .login(&args.user, &args.password)
        .await
        .with_context(|| format!("cannot log in to {}", args.site))?;

    let collections = session.list_collections(None).await?;
    info!("mirroring {} collections from {}", collections.len(), args.site);

    for coll in &collections {
        if let Err(err) = sync_collection(&session, &coll.name, &args.dir, &args.rendition).await {
            warn!(collection = %coll.name, "cannot mirror: {err:#}");
        }
    }

    session.logout().await?;
    Ok(())
}

/// Download every member of one collection into `<root>/<collection>/`.
async fn sync_collection(
    session: &Session,
    name: &str,
    root: &Path,
    rendition: &str,
) -> anyhow::Result<()> {
    let coll = session.get_collection(name, None).await?;
    let dir = collection_dir(root, name);
    std::fs::create_dir_all(&dir).with_context(|| format!("cannot create {}", dir.display()))?;

    info!("downloading collection {name:?} ({} blobs)", coll.elements.len());
    for (id, entry) in &coll.elements {
        let target = dir.join(local_filename(entry));
        if target.exists() && std::fs::metadata(&target)?.len() > 0 {
            continue;
        }

        let blob = session.get_blob(name, id, None, Some(rendition)).await?;
        let data = blob.data.unwrap_or_default();
        std::fs::write(&target, &data)
            .with_context(|| format!("cannot write {}", target.display()))?;
        set_file_mode(&target, entry.permission.unwrap_or_default())?;
        info!("downloaded {} ({} bytes)", target.display(), data.len());
    }
    Ok(())
}

/// Map a collection name onto a directory path, one level per segment.
fn collection_dir(root: &Path, name: &str) -> PathBuf {
    let mut dir = root.to_path_buf();
    for segment in name.split('/').filter(|s| !s.is_empty() && *s != "..") {
        dir.push(segment);
    }
    dir
}

/// Local file name for a blob: the trailing component of its upload name, or
/// the blob id when the name is missing or unusable.
fn local_filename(blob: &Blob) -> String {
    match blob
        .filename
        .as_deref()
        .map(|name| name.rsplit('/').next().unwrap_or(name))
    {
        Some(name) if !name.is_empty() && name != "." && name != ".." => name.to_owned(),
        _ => blob.id.to_string(),
    }
}

/// Permission tiers map onto owner/group/world readability.
#[cfg_attr(not(unix), allow(dead_code))]
fn file_mode(perm: Permission) -> u32 {
    match perm {
        Permission::Private => 0o600,
        Permission::Shared => 0o640,
        Permission::Public => 0o644,
    }
}

#[cfg(unix)]
fn set_file_mode(path: &Path, perm: Permission) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(file_mode(perm)))
        .with_context(|| format!("cannot set mode of {}", path.display()))
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path, _perm: Permission) -> anyhow::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrb_client::BlobId;

    const ID: &str = "0123456789abcdef0123456789abcdef01234567";

    fn listed_blob(filename: Option<&str>) -> Blob {
        Blob {
            id: BlobId::parse(ID).unwrap(),
            filename: filename.map(str::to_owned),
            mime: "image/jpeg".to_owned(),
            timestamp: None,
            permission: Some(Permission::Private),
            data: None,
        }
    }

    #[test]
    fn permission_modes() {
        assert_eq!(file_mode(Permission::Private), 0o600);
        assert_eq!(file_mode(Permission::Shared), 0o640);
        assert_eq!(file_mode(Permission::Public), 0o644);
    }

    #[test]
    fn collection_dirs_nest_per_segment() {
        let root = Path::new("/srv/mirror");
        assert_eq!(collection_dir(root, ""), root);
        assert_eq!(
            collection_dir(root, "some/collection"),
            root.join("some").join("collection")
        );
        assert_eq!(collection_dir(root, "../escape"), root.join("escape"));
    }

    #[test]
    fn local_filenames_fall_back_to_the_id() {
        assert_eq!(local_filename(&listed_blob(Some("lena.jpg"))), "lena.jpg");
        assert_eq!(local_filename(&listed_blob(Some("a/b.jpg"))), "b.jpg");
        assert_eq!(local_filename(&listed_blob(Some(""))), ID);
        assert_eq!(local_filename(&listed_blob(None)), ID);
    }

    #[cfg(unix)]
    #[test]
    fn modes_are_applied() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.jpg");
        std::fs::write(&path, b"x").unwrap();

        set_file_mode(&path, Permission::Shared).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }
}
