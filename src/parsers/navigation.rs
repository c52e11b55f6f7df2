use super::tokens::{check_status, TokenCursor};
use crate::base::DecodeError;
use crate::types::{
    CartesianPoint, LandmarkData, NavigationData, PolarPoint, PoseExtras, PoseRecord, Reflector,
    ReflectorDetails, ReflectorSet, ScanSector,
};
use log::trace;

/// Index of the status field in `mNPOSGetData` and `mNLMDGetData` replies.
pub const DATA_STATUS_INDEX: usize = 3;

/// Index of the status field in `mNMAPDoMapping` replies.
pub const MAPPING_STATUS_INDEX: usize = 2;

/// Name of the only decoded scan channel.
pub const SCAN_CHANNEL_DIST1: &str = "DIST1";

/// Smallest encoding of one reflector: three absent flags.
const MIN_REFLECTOR_TOKENS: usize = 3;

/// Decodes `sAN mNPOSGetData <version> <status> <wait> <mask> <pose> <reflectors> <scan>`.
pub fn decode_navigation(tokens: &[&str]) -> Result<NavigationData, DecodeError> {
    check_status(tokens, DATA_STATUS_INDEX)?;
    let mut cursor = TokenCursor::new(tokens, DATA_STATUS_INDEX + 2);
    let mask = cursor.next_hex()?;
    let pose = if cursor.next_flag()? {
        Some(decode_pose(&mut cursor)?)
    } else {
        None
    };
    let reflectors = decode_optional_reflectors(&mut cursor)?;
    let scan = decode_scan(&mut cursor)?;
    trace!(
        "Decoded navigation data: mask={:X}, pose={}, reflectors={:?}, scan points={:?}",
        mask,
        pose.is_some(),
        reflectors.as_ref().map(ReflectorSet::len),
        scan.as_ref().map(|s| s.num_data_points)
    );
    Ok(NavigationData {
        mask,
        pose,
        reflectors,
        scan,
    })
}

/// Decodes `sAN mNLMDGetData <version> <status> <wait> <mask> <reflectors> <scan>`.
pub fn decode_landmarks(tokens: &[&str]) -> Result<LandmarkData, DecodeError> {
    check_status(tokens, DATA_STATUS_INDEX)?;
    let mut cursor = TokenCursor::new(tokens, DATA_STATUS_INDEX + 2);
    let mask = cursor.next_hex()?;
    let reflectors = decode_optional_reflectors(&mut cursor)?;
    let scan = decode_scan(&mut cursor)?;
    Ok(LandmarkData {
        mask,
        reflectors,
        scan,
    })
}

/// Decodes `sAN mNMAPDoMapping <status> <reflectors>`.
pub fn decode_mapping(tokens: &[&str]) -> Result<Option<ReflectorSet>, DecodeError> {
    check_status(tokens, MAPPING_STATUS_INDEX)?;
    let mut cursor = TokenCursor::new(tokens, MAPPING_STATUS_INDEX + 1);
    decode_optional_reflectors(&mut cursor)
}

fn decode_pose(cursor: &mut TokenCursor<'_>) -> Result<PoseRecord, DecodeError> {
    let x = cursor.next_hex_i32()?;
    let y = cursor.next_hex_i32()?;
    let phi = cursor.next_hex_i32()?;
    let extras = if cursor.next_flag()? {
        Some(PoseExtras {
            output_mode: cursor.next_hex()?,
            timestamp: cursor.next_hex()?,
            mean_deviation: cursor.next_hex()?,
            position_mode: cursor.next_hex()?,
            info_state: cursor.next_hex()?,
            used_reflectors: cursor.next_hex()?,
        })
    } else {
        None
    };
    Ok(PoseRecord { x, y, phi, extras })
}

fn decode_optional_reflectors(
    cursor: &mut TokenCursor<'_>,
) -> Result<Option<ReflectorSet>, DecodeError> {
    if cursor.next_flag()? {
        decode_reflectors(cursor).map(Some)
    } else {
        Ok(None)
    }
}

fn decode_reflectors(cursor: &mut TokenCursor<'_>) -> Result<ReflectorSet, DecodeError> {
    let filter = cursor.next_hex()?;
    let count = cursor.next_hex()? as usize;
    cursor.require(count.saturating_mul(MIN_REFLECTOR_TOKENS))?;

    let mut reflectors = Vec::with_capacity(count);
    for _ in 0..count {
        let cartesian = if cursor.next_flag()? {
            Some(CartesianPoint {
                x: cursor.next_hex_i32()?,
                y: cursor.next_hex_i32()?,
            })
        } else {
            None
        };
        let polar = if cursor.next_flag()? {
            Some(PolarPoint {
                distance: cursor.next_hex()?,
                angle: cursor.next_hex()?,
            })
        } else {
            None
        };
        let details = if cursor.next_flag()? {
            Some(ReflectorDetails {
                local_id: cursor.next_hex()?,
                global_id: cursor.next_hex()?,
                reflector_type: cursor.next_hex()?,
                subtype: cursor.next_hex()?,
                quality: cursor.next_hex()?,
                timestamp: cursor.next_hex()?,
                size: cursor.next_hex()?,
                hit_count: cursor.next_hex()?,
                mean_echo_amplitude: cursor.next_hex()?,
                start_index: cursor.next_hex()?,
                end_index: cursor.next_hex()?,
            })
        } else {
            None
        };
        reflectors.push(Reflector {
            cartesian,
            polar,
            details,
        });
    }
    Ok(ReflectorSet { filter, reflectors })
}

fn decode_scan(cursor: &mut TokenCursor<'_>) -> Result<Option<ScanSector>, DecodeError> {
    let channels = cursor.next_hex()?;
    match channels {
        0 => Ok(None),
        1 => decode_dist1(cursor).map(Some),
        _ => Err(DecodeError::UnsupportedChannelLayout { channels }),
    }
}

fn decode_dist1(cursor: &mut TokenCursor<'_>) -> Result<ScanSector, DecodeError> {
    cursor.expect(SCAN_CHANNEL_DIST1)?;
    // scale factor and offset, always 1.0 and 0.0
    cursor.next_token()?;
    cursor.next_token()?;
    let angle_start = f64::from(cursor.next_hex()?) / 1000.0;
    let angle_step = f64::from(cursor.next_hex()?) / 1000.0;
    let timestamp_start = cursor.next_hex()?;
    let num_data_points = cursor.next_hex()? as usize;
    cursor.require(num_data_points)?;

    let range_values = (0..num_data_points)
        .map(|_| cursor.next_hex())
        .collect::<Result<Vec<u32>, DecodeError>>()?;
    let angle_stop = match num_data_points {
        0 => angle_start,
        n => angle_start + (n - 1) as f64 * angle_step,
    };
    Ok(ScanSector {
        angle_start,
        angle_step,
        angle_stop,
        timestamp_start,
        timestamp_stop: timestamp_start,
        num_data_points,
        range_values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::tokens::tokenize;

    const TEN_RANGES: &str = "3E8 3E9 3EA 3EB 3EC 3ED 3EE 3EF 3F0 3F1";

    fn decode_nav(payload: &str) -> Result<NavigationData, DecodeError> {
        decode_navigation(&tokenize(payload.as_bytes()).unwrap())
    }

    #[test]
    fn single_channel_scan() {
        let payload = format!(
            "sAN mNPOSGetData 1 0 1 4 0 0 1 DIST1 3F800000 00000000 3E8 FA 1F4 A {}",
            TEN_RANGES
        );
        let data = decode_nav(&payload).unwrap();
        assert_eq!(data.mask, 4);
        assert!(data.pose.is_none());
        assert!(data.reflectors.is_none());

        let scan = data.scan.unwrap();
        assert_eq!(scan.angle_start, 1.0);
        assert_eq!(scan.angle_step, 0.25);
        assert_eq!(scan.angle_stop, 1.0 + 9.0 * 0.25);
        assert_eq!(scan.timestamp_start, 500);
        assert_eq!(scan.timestamp_stop, 500);
        assert_eq!(scan.num_data_points, 10);
        assert_eq!(scan.range_values, (1000..1010).collect::<Vec<u32>>());
    }

    #[test]
    fn pose_and_reflectors() {
        let payload = "sAN mNPOSGetData 1 0 1 3 \
            1 3E8 FFFFFC18 15F90 1 0 12C 5 2 0 4 \
            1 0 2 \
            1 64 C8 1 12C 2710 1 1 2 3 1 5 6 50 7 8 9 B \
            0 1 3E8 7530 0 \
            0";
        let data = decode_nav(payload).unwrap();
        let pose = data.pose.unwrap();
        assert_eq!((pose.x, pose.y, pose.phi), (1000, -1000, 90000));
        let extras = pose.extras.unwrap();
        assert_eq!(extras.timestamp, 300);
        assert_eq!(extras.used_reflectors, 4);

        let set = data.reflectors.unwrap();
        assert_eq!(set.filter, 0);
        assert_eq!(set.len(), 2);
        let first = &set.reflectors[0];
        assert_eq!(first.cartesian, Some(CartesianPoint { x: 100, y: 200 }));
        assert_eq!(
            first.polar,
            Some(PolarPoint {
                distance: 300,
                angle: 10000
            })
        );
        let details = first.details.as_ref().unwrap();
        assert_eq!(details.local_id, 1);
        assert_eq!(details.size, 0x50);
        assert_eq!(details.end_index, 0xB);

        let second = &set.reflectors[1];
        assert_eq!(second.cartesian, None);
        assert_eq!(
            second.polar,
            Some(PolarPoint {
                distance: 1000,
                angle: 30000
            })
        );
        assert!(second.details.is_none());
        assert!(data.scan.is_none());
    }

    #[test]
    fn rejected_status_stops_decoding() {
        let err = decode_nav("sAN mNPOSGetData 1 5").unwrap_err();
        assert_eq!(
            err,
            DecodeError::DeviceRejected {
                index: 3,
                status: "5".to_owned()
            }
        );
    }

    #[test]
    fn two_channel_layout_is_unsupported() {
        let err = decode_nav("sAN mNPOSGetData 1 0 1 4 0 0 2 DIST1 ANGL1").unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedChannelLayout { channels: 2 });
    }

    #[test]
    fn short_replies_are_truncated_errors() {
        assert!(matches!(
            decode_nav("sAN mNPOSGetData 1 0 1 4 1 3E8"),
            Err(DecodeError::Truncated { .. })
        ));
        assert!(matches!(
            decode_nav("sAN mNPOSGetData 1 0 1 4 0 0 1 DIST1 1 0 0 3E8 0 A 1 2 3"),
            Err(DecodeError::Truncated { .. })
        ));
        assert!(matches!(
            decode_nav("sAN mNPOSGetData 1 0 1 4 0 1 0 FFFFFFFF"),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn wrong_channel_name_is_rejected() {
        assert!(matches!(
            decode_nav("sAN mNPOSGetData 1 0 1 4 0 0 1 RSSI1 1 0 0 3E8 0 0"),
            Err(DecodeError::UnexpectedToken { index: 9, .. })
        ));
    }

    #[test]
    fn empty_sweep_stops_at_start() {
        let data = decode_nav("sAN mNPOSGetData 1 0 1 4 0 0 1 DIST1 1 0 7D0 3E8 0 0").unwrap();
        let scan = data.scan.unwrap();
        assert_eq!(scan.num_data_points, 0);
        assert_eq!(scan.angle_stop, scan.angle_start);
        assert!(scan.range_values.is_empty());
    }

    #[test]
    fn landmark_reply() {
        let tokens = tokenize(b"sAN mNLMDGetData 1 0 1 1 1 0 1 0 1 3E8 2710 0 0").unwrap();
        let data = decode_landmarks(&tokens).unwrap();
        assert_eq!(data.mask, 1);
        let set = data.reflectors.unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.reflectors[0].polar.unwrap().distance, 1000);
        assert!(data.scan.is_none());

        let rejected = tokenize(b"sAN mNLMDGetData 1 1").unwrap();
        assert!(matches!(
            decode_landmarks(&rejected),
            Err(DecodeError::DeviceRejected { index: 3, .. })
        ));
    }

    #[test]
    fn mapping_reply() {
        let tokens = tokenize(b"sAN mNMAPDoMapping 0 1 0 1 1 3E8 7D0 0 0").unwrap();
        let set = decode_mapping(&tokens).unwrap().unwrap();
        assert_eq!(set.reflectors[0].cartesian, Some(CartesianPoint { x: 1000, y: 2000 }));

        let empty = tokenize(b"sAN mNMAPDoMapping 0 0").unwrap();
        assert_eq!(decode_mapping(&empty).unwrap(), None);

        let rejected = tokenize(b"sAN mNMAPDoMapping 1").unwrap();
        assert!(matches!(
            decode_mapping(&rejected),
            Err(DecodeError::DeviceRejected { index: 2, .. })
        ));
    }
}
