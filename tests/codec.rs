use uribeacon::btuuid::services::URI_BEACON;
use uribeacon::error::ErrorKind;
use uribeacon::tlv::TlvReader;
use uribeacon::uri::{self, MAX_ADVERTISEMENT_LEN, MAX_ENCODED_URI_LEN};
use uribeacon::*;

#[test]
fn pedometer_advertisement() {
    let data = [0x02, 0x01, 0x01, 0x0a, 0x09, 0x50, 0x65, 0x64, 0x6f, 0x6d, 0x65, 0x74, 0x65, 0x72];
    let index = AdvertisementIndex::new(&data);
    assert_eq!(index.local_name(), Some("Pedometer"));
    assert!(index.service_uuids().is_empty());
    assert_eq!(index.tx_power_level(), None);
    assert_eq!(index.flags(), Some(0x01));
    assert!(!index.is_truncated());

    let adv = index.to_advertisement_data();
    assert_eq!(adv.local_name.as_deref(), Some("Pedometer"));
    assert!(adv.manufacturer_data.is_none());
    assert!(adv.service_data.is_empty());
}

#[test]
fn uribeacon_org_encoding() {
    let encoded = uri::encode("http://www.uribeacon.org").unwrap();
    let mut expected = vec![0x00];
    expected.extend_from_slice(b"uribeacon");
    expected.push(0x08);
    assert_eq!(&encoded[..], &expected[..]);
}

#[test]
fn round_trip_over_every_table_entry() {
    let prefixes = ["http://www.", "https://www.", "http://", "https://"];
    let suffixes = [
        ".com/", ".org/", ".edu/", ".net/", ".info/", ".biz/", ".gov/", ".com", ".org", ".edu", ".net", ".info",
        ".biz", ".gov",
    ];
    for prefix in prefixes {
        for suffix in suffixes {
            for uri in [format!("{prefix}go{suffix}"), format!("{prefix}go{suffix}x")] {
                let encoded = uri::encode(&uri).unwrap();
                assert!(encoded.len() <= MAX_ENCODED_URI_LEN);
                assert_eq!(uri::decode(&encoded).unwrap(), uri::normalize(&uri), "{uri}");
            }
        }
    }
}

#[test]
fn round_trip_normalizes_input() {
    let uri = "  HTTPS://Goo.gl/S6zT6P ";
    let encoded = uri::encode(uri).unwrap();
    assert_eq!(uri::decode(&encoded).unwrap(), "https://Goo.gl/S6zT6P");
}

#[test]
fn long_uri_is_rejected_not_truncated() {
    let uri = "https://www.example.com/a/rather/long/path";
    match uri::encode(uri).unwrap_err().kind() {
        ErrorKind::UriTooLong(len) => assert!(len > MAX_ENCODED_URI_LEN),
        kind => panic!("unexpected {kind:?}"),
    }

    // 1 prefix byte + 17 literal bytes fits exactly
    let exact = "http://abcdefghijklmnopq";
    assert_eq!(uri::encode(exact).unwrap().len(), MAX_ENCODED_URI_LEN);
    let over = "http://abcdefghijklmnopqr";
    assert_eq!(uri::encode(over).unwrap_err().kind(), ErrorKind::UriTooLong(19));
}

#[test]
fn only_http_and_https_are_encoded() {
    for uri in ["ftp://example.com", "example.com", "urn:uuid:b1e13d51", ""] {
        assert_eq!(uri::encode(uri).unwrap_err().kind(), ErrorKind::UnsupportedScheme, "{uri}");
    }
    assert_eq!(
        uri::encode("http://bad host").unwrap_err().kind(),
        ErrorKind::InvalidParameter
    );
}

#[test]
fn decode_rejects_unknown_prefix() {
    assert_eq!(uri::decode(&[]).unwrap_err().kind(), ErrorKind::DecodeFailure);
    assert_eq!(uri::decode(&[0x04, b'a']).unwrap_err().kind(), ErrorKind::DecodeFailure);
}

#[test]
fn truncated_trailing_record_keeps_earlier_entries() {
    let data = [0x02, 0x01, 0x06, 0x03, 0x03, 0xd8, 0xfe, 0x05, 0xff, 0x01];
    let mut reader = TlvReader::new(&data);
    let types: Vec<u8> = reader.by_ref().map(|entry| entry.ad_type).collect();
    assert_eq!(types, [0x01, 0x03]);
    assert!(reader.is_truncated());

    let index = AdvertisementIndex::new(&data);
    assert_eq!(index.service_uuids(), &[URI_BEACON]);
    assert!(index.manufacturer_data_entries().is_empty());
}

#[test]
fn complete_index_rejects_truncated_records() {
    let data = [0x02, 0x01, 0x06, 0x05, 0xff, 0x01];
    assert_eq!(
        AdvertisementIndex::new_complete(&data).err().map(|err| err.kind()),
        Some(ErrorKind::MalformedAdvertisement)
    );
    assert!(AdvertisementIndex::new_complete(&data[..3]).is_ok());
}

#[test]
fn short_structures_are_skipped() {
    let data = [0x02, 0xff, 0x4c, 0x02, 0x16, 0xd8, 0x03, 0x03, 0xd8, 0xfe];
    let index = AdvertisementIndex::new(&data);
    assert!(index.manufacturer_data_entries().is_empty());
    assert!(index.service_data_entries().is_empty());
    assert_eq!(index.service_uuids(), &[URI_BEACON]);
}

#[test]
fn all_ones_mask_is_an_exact_prefix_match() {
    let pattern = DataPattern::with_mask(&[0x10, 0x20, 0x30], &[0xff; 3]);
    assert!(pattern.matches(&[0x10, 0x20, 0x30]));
    assert!(pattern.matches(&[0x10, 0x20, 0x30, 0x40]));
    assert!(!pattern.matches(&[0x10, 0x20, 0x31]));
    assert!(!pattern.matches(&[0x10, 0x20]));
    assert_eq!(
        pattern.matches(&[0x10, 0x20, 0x30, 0x00]),
        DataPattern::new(&[0x10, 0x20, 0x30]).matches(&[0x10, 0x20, 0x30, 0x00])
    );
}

#[test]
fn filter_predicates_are_conjunctive() {
    let beacon = UriBeacon::new("https://example.com", -12, 0x00).unwrap();
    let data = beacon.to_advertisement().unwrap();
    let index = AdvertisementIndex::new(&data);
    let device = DeviceId::new("AA:BB");

    assert!(AdvertisementFilter::new().matches(&device, &index));
    let filter = AdvertisementFilter::new()
        .service_uuid(URI_BEACON)
        .service_data(URI_BEACON, DataPattern::new(&[0x00, (-12i8) as u8]));
    assert!(filter.matches(&device, &index));
    assert!(!filter.clone().device(DeviceId::new("CC:DD")).matches(&device, &index));
    assert!(!filter.local_name("Pedometer").matches(&device, &index));

    let masked = AdvertisementFilter::new().service_uuid_masked(
        Uuid::from_u16(0xfe00),
        Uuid::from_u128(0xffff_ff00_ffff_ffff_ffff_ffff_ffff_ffff),
    );
    assert!(masked.matches(&device, &index));
}

#[test]
fn beacon_advertisement_layout() {
    let beacon = UriBeacon::new("http://www.uribeacon.org", -20, 0x01).unwrap();
    let adv = beacon.to_advertisement().unwrap();
    assert!(adv.len() <= MAX_ADVERTISEMENT_LEN);
    assert_eq!(&adv[..7], &[0x02, 0x01, 0x06, 0x03, 0x03, 0xd8, 0xfe]);
    assert_eq!(adv[7] as usize, adv.len() - 8);
    assert_eq!(&adv[8..11], &[0x16, 0xd8, 0xfe]);
    assert_eq!(&adv[11..13], &[0x01, (-20i8) as u8]);

    let parsed = UriBeacon::from_advertisement(&AdvertisementIndex::new(&adv)).unwrap();
    assert_eq!(parsed, beacon);
}

#[test]
fn maximum_length_beacon_fits_in_one_advertisement() {
    let beacon = UriBeacon::new("http://abcdefghijklmnopq", 0, 0).unwrap();
    assert_eq!(beacon.to_advertisement().unwrap().len(), MAX_ADVERTISEMENT_LEN);
}

#[test]
fn unparsable_service_data_is_a_decode_failure() {
    let data = [0x05, 0x16, 0xd8, 0xfe, 0x00, 0x00];
    let index = AdvertisementIndex::new(&data);
    assert_eq!(
        UriBeacon::from_advertisement(&index).unwrap_err().kind(),
        ErrorKind::DecodeFailure
    );
}
