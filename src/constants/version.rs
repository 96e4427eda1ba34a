use semver::Version;

/// vergen's placeholder when git metadata was unavailable at build time.
const IDEMPOTENT_SHA: &str = "VERGEN_IDEMPOTENT_OUTPUT";

pub fn git_sha() -> Option<&'static str> {
    match env!("VERGEN_GIT_SHA") {
        IDEMPOTENT_SHA => None,
        sha => Some(sha),
    }
}

pub fn get_version() -> String {
    let semver = env!("CARGO_PKG_VERSION").parse::<Version>();

    match (semver, git_sha()) {
        (Ok(semver), Some(sha)) => format!("{semver} ({sha})"),
        (Ok(semver), None) => semver.to_string(),
        (Err(_), _) => {
            tracing::warn!("couldn't parse a semver out of Cargo.toml? defaulting to 0.0.0-unknown.");
            String::from("0.0.0-unknown")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_starts_with_package_version() {
        assert!(get_version().starts_with(env!("CARGO_PKG_VERSION")));
    }
}
