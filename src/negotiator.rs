//! Format negotiation.
//!
//! Turns a [`FormatSpec`] into a provider-native descriptor and applies it,
//! and flattens a device's native media type list into the distinct
//! `FormatSpec`s it can actually run at.

use crate::errors::{CaptureError, Result};
use crate::provider::{CaptureProvider, NativeFormat, NativeFormatInfo, ProviderSession};
use crate::types::{FormatSpec, FrameEncoding, Resolution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub fn validate(spec: &FormatSpec) -> Result<()> {
    if !spec.is_well_formed() {
        return Err(CaptureError::UnsupportedFormat(format!(
            "malformed format {spec}: width, height and frame rate must be non-zero"
        )));
    }
    Ok(())
}

/// Build the provider-native descriptor for `spec` without touching a device.
pub fn build_native_descriptor<P: CaptureProvider>(
    provider: &P,
    spec: &FormatSpec,
) -> Result<NativeFormat> {
    validate(spec)?;
    provider
        .create_native_type(spec.encoding, spec.width(), spec.height(), spec.frame_rate)
        .map_err(CaptureError::unsupported_format)
}

/// Build the native descriptor for `spec` and apply it to the session's
/// active stream.
pub fn apply_format<P: CaptureProvider>(
    provider: &P,
    session: &mut P::Session,
    spec: &FormatSpec,
) -> Result<NativeFormat> {
    let native = build_native_descriptor(provider, spec)?;
    session
        .apply_format(&native)
        .map_err(CaptureError::unsupported_format)?;
    log::debug!("Applied format {} ({})", spec, native.subtype);
    Ok(native)
}

/// Low/typical/high operating points advertised by one native entry.
///
/// The minimum rate is emitted when it is integral; the nominal rate when it
/// is integral and differs from the minimum; the maximum when it is integral
/// and differs from both. Entries with an unrecognized subtype yield nothing.
pub fn tiered_formats(info: &NativeFormatInfo) -> Vec<FormatSpec> {
    let encoding = match FrameEncoding::from_native(info.subtype) {
        Some(encoding) => encoding,
        None => return Vec::new(),
    };

    let at = |fps: u32| FormatSpec::new(info.width, info.height, encoding, fps);
    let min = info.min_rate.numerator;
    let nominal = info.nominal_rate.numerator;
    let max = info.max_rate.numerator;

    let mut formats = Vec::with_capacity(3);
    if info.min_rate.denominator == 1 {
        formats.push(at(min));
    }
    if info.nominal_rate.denominator == 1 && nominal != min {
        formats.push(at(nominal));
    }
    if info.max_rate.denominator == 1 && max != nominal && max != min {
        formats.push(at(max));
    }
    formats
}

/// Walk the native media type list in index order and collect the tiered
/// formats of every recognized entry.
///
/// A query failure after the first entry ends the walk with what was
/// gathered so far; a failure on the very first query is an error since no
/// capability data was obtained.
pub fn enumerate_native_formats<S: ProviderSession + ?Sized>(
    session: &mut S,
) -> Result<Vec<FormatSpec>> {
    let mut formats = Vec::new();
    let mut index = 0;

    loop {
        let info = match session.query_native_format(index) {
            Ok(Some(info)) => info,
            Ok(None) => break,
            Err(e) if index == 0 => return Err(CaptureError::native_query(e)),
            Err(e) => {
                log::debug!("Native type query stopped at index {}: {}", index, e);
                break;
            }
        };

        let tiers = tiered_formats(&info);
        if tiers.is_empty() {
            log::trace!("Skipping native type {} ({})", index, info.subtype);
        }
        formats.extend(tiers);
        index += 1;
    }

    log::debug!(
        "Read {} native types, {} usable formats",
        index,
        formats.len()
    );
    Ok(formats)
}

/// Distinct encodings in the order they first appear.
pub fn compatible_encodings(formats: &[FormatSpec]) -> Vec<FrameEncoding> {
    let mut encodings = Vec::new();
    for format in formats {
        if !encodings.contains(&format.encoding) {
            encodings.push(format.encoding);
        }
    }
    encodings
}

/// Resolution to sorted, deduplicated frame rates for one encoding.
pub fn formats_by_resolution(
    formats: &[FormatSpec],
    encoding: FrameEncoding,
) -> BTreeMap<Resolution, Vec<u32>> {
    let mut map: BTreeMap<Resolution, Vec<u32>> = BTreeMap::new();
    for format in formats.iter().filter(|f| f.encoding == encoding) {
        map.entry(format.resolution).or_default().push(format.frame_rate);
    }
    for rates in map.values_mut() {
        rates.sort_unstable();
        rates.dedup();
    }
    map
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatRequest {
    /// Exactly this format, or nothing.
    Exact(FormatSpec),
    /// Largest frame area, ties broken by frame rate.
    HighestResolution { encoding: Option<FrameEncoding> },
    /// Fastest frame rate, ties broken by frame area.
    HighestFrameRate { encoding: Option<FrameEncoding> },
    /// Nearest resolution then nearest frame rate, same encoding preferred.
    Closest(FormatSpec),
}

pub fn resolve_request(request: &FormatRequest, available: &[FormatSpec]) -> Option<FormatSpec> {
    let matches_encoding =
        |encoding: &Option<FrameEncoding>, f: &FormatSpec| encoding.map_or(true, |e| f.encoding == e);

    match request {
        FormatRequest::Exact(spec) => available.iter().copied().find(|f| f == spec),
        FormatRequest::HighestResolution { encoding } => available
            .iter()
            .copied()
            .filter(|f| matches_encoding(encoding, f))
            .max_by_key(|f| (f.resolution.pixels(), f.frame_rate)),
        FormatRequest::HighestFrameRate { encoding } => available
            .iter()
            .copied()
            .filter(|f| matches_encoding(encoding, f))
            .max_by_key(|f| (f.frame_rate, f.resolution.pixels())),
        FormatRequest::Closest(target) => {
            let same_encoding = available.iter().any(|f| f.encoding == target.encoding);
            available
                .iter()
                .copied()
                .filter(|f| !same_encoding || f.encoding == target.encoding)
                .min_by_key(|f| {
                    let size = f.width().abs_diff(target.width()) as u64
                        + f.height().abs_diff(target.height()) as u64;
                    (size, f.frame_rate.abs_diff(target.frame_rate))
                })
        }
    }
}
