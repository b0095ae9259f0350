use std::net::IpAddr;
use warp::filters::cors::Builder;

/// Configure a `cors::Builder`.
///
/// If `allow_origin.is_none()` the `default_origin` is used.
pub fn set_builder_origins(
    builder: Builder,
    allow_origin: Option<&str>,
    default_origin: (IpAddr, u16),
) -> Result<Builder, String> {
    if let Some(allow_origin) = allow_origin {
        let origins = allow_origin
            .split(',')
            .map(|s| verify_cors_origin_str(s).map(|_| s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(builder.allow_origins(origins))
    } else {
        let origin = match default_origin.0 {
            IpAddr::V4(_) => format!("http://{}:{}", default_origin.0, default_origin.1),
            IpAddr::V6(_) => format!("http://[{}]:{}", default_origin.0, default_origin.1),
        };
        verify_cors_origin_str(&origin)?;
        Ok(builder.allow_origin(origin.as_str()))
    }
}

/// Verify that `s` can be used as a CORS origin.
///
/// ## Notes
///
/// We need this function since `warp` will panic if provided an invalid origin. The verification
/// logic is taken from here:
///
/// https://github.com/seanmonstar/warp/blob/3d1760c6ca35ad2d72c4f74a9ba5e9b38af1ab4c/src/filters/cors.rs#L616
///
/// Ideally we should make a PR to `warp` to expose this behaviour, however we defer this for a
/// later time. The impact of a false-positive in this function is fairly limited, since only the
/// user can configure the CORS origin.
fn verify_cors_origin_str(s: &str) -> Result<(), String> {
    // Always the wildcard origin.
    if s == "*" {
        return Ok(());
    }

    let mut parts = s.splitn(2, "://");
    let scheme = parts
        .next()
        .ok_or_else(|| format!("{} is missing a scheme", s))?;
    let rest = parts
        .next()
        .ok_or_else(|| format!("{} is missing the part following the scheme", s))?;

    warp::http::uri::Authority::from_maybe_shared(rest.to_string())
        .map_err(|e| format!("{} does not have a valid authority: {}", s, e))?;

    if scheme.is_empty() {
        return Err(format!("{} has an empty scheme", s));
    }

    Ok(())
}
