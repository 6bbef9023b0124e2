//! Conversions between wire messages and the aggregation core's types.
//!
//! The transport deals in generated protobuf types while the watermark
//! buffer consumes plain domain values. Decoding is fallible: proto3
//! message fields arrive as `Option` and enum fields as open integers.
//! Membership-service implementations use these converters to feed the
//! buffer from batched updates.

use cohort_common::Endpoint;
use cohort_membership::{LinkStatus, LinkUpdate};

use crate::error::TransportError;
use crate::proto;

/// Decode a wire endpoint into a domain [`Endpoint`].
///
/// # Errors
///
/// Fails if the host is empty or the port does not fit a `u16`.
pub fn endpoint_from_proto(endpoint: proto::Endpoint) -> Result<Endpoint, TransportError> {
    if endpoint.host.is_empty() {
        return Err(TransportError::Conversion(
            "endpoint host is empty".to_string(),
        ));
    }
    let port = u16::try_from(endpoint.port).map_err(|_| {
        TransportError::Conversion(format!("endpoint port {} out of range", endpoint.port))
    })?;
    Ok(Endpoint::new(endpoint.host, port))
}

/// Encode a domain [`Endpoint`] for the wire.
pub fn endpoint_to_proto(endpoint: &Endpoint) -> proto::Endpoint {
    proto::Endpoint {
        host: endpoint.host().to_string(),
        port: u32::from(endpoint.port()),
    }
}

/// Decode a wire link update into a domain [`LinkUpdate`].
///
/// # Errors
///
/// Fails if `src` or `dst` is missing or malformed, or the status is not
/// a known value.
pub fn link_update_from_proto(update: proto::LinkUpdate) -> Result<LinkUpdate, TransportError> {
    let src = update
        .src
        .ok_or_else(|| TransportError::Conversion("link update missing src".to_string()))?;
    let dst = update
        .dst
        .ok_or_else(|| TransportError::Conversion("link update missing dst".to_string()))?;

    let status = match proto::LinkStatus::try_from(update.status) {
        Ok(proto::LinkStatus::Up) => LinkStatus::Up,
        Ok(proto::LinkStatus::Down) => LinkStatus::Down,
        _ => {
            return Err(TransportError::Conversion(format!(
                "unknown link status {}",
                update.status
            )))
        }
    };

    Ok(LinkUpdate::new(
        endpoint_from_proto(src)?,
        endpoint_from_proto(dst)?,
        status,
        update.config_id,
    ))
}

/// Encode a domain [`LinkUpdate`] for the wire.
pub fn link_update_to_proto(update: &LinkUpdate) -> proto::LinkUpdate {
    let status = match update.status {
        LinkStatus::Up => proto::LinkStatus::Up,
        LinkStatus::Down => proto::LinkStatus::Down,
    };
    proto::LinkUpdate {
        src: Some(endpoint_to_proto(&update.src)),
        dst: Some(endpoint_to_proto(&update.dst)),
        status: status.into(),
        config_id: update.config_id,
    }
}
