//! Generated gRPC bindings for `discount.v1` plus conversions from the core
//! types.

pub mod discount {
    pub mod v1 {
        tonic::include_proto!("discount.v1");
    }
}

pub mod v1 {
    pub use crate::discount::v1::*;
}

const NANOS_PER_SECOND: i32 = 1_000_000_000;

/// Converts a jiff timestamp into the protobuf well-known type.
///
/// Protobuf requires `nanos` to be non-negative, so instants before the epoch
/// borrow one second.
pub fn to_proto_timestamp(ts: jiff::Timestamp) -> prost_types::Timestamp {
    let mut seconds = ts.as_second();
    let mut nanos = ts.subsec_nanosecond();
    if nanos < 0 {
        seconds -= 1;
        nanos += NANOS_PER_SECOND;
    }
    prost_types::Timestamp { seconds, nanos }
}

impl From<discount_core::DiscountCode> for v1::DiscountCode {
    fn from(value: discount_core::DiscountCode) -> Self {
        Self {
            code: value.code.into_inner(),
            created_at: Some(to_proto_timestamp(value.created_at)),
            used: value.used,
            used_at: value.used_at.map(to_proto_timestamp),
        }
    }
}

impl From<discount_core::Page<discount_core::DiscountCode>> for v1::ListCodesResponse {
    fn from(value: discount_core::Page<discount_core::DiscountCode>) -> Self {
        Self {
            page: value.page,
            page_size: value.page_size,
            total: value.total,
            items: value.items.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discount_core::{Code, DiscountCode, Page, PageQuery};
    use jiff::Timestamp;

    #[test]
    fn timestamp_keeps_subsecond_precision() {
        let ts = Timestamp::new(1_700_000_000, 123_456_000).unwrap();
        let proto = to_proto_timestamp(ts);
        assert_eq!(proto.seconds, 1_700_000_000);
        assert_eq!(proto.nanos, 123_456_000);
    }

    #[test]
    fn timestamp_before_epoch_has_positive_nanos() {
        let ts = Timestamp::new(-1, -250_000_000).unwrap();
        let proto = to_proto_timestamp(ts);
        assert_eq!(proto.seconds, -2);
        assert_eq!(proto.nanos, 750_000_000);
    }

    #[test]
    fn unused_code_has_no_used_at() {
        let created_at = Timestamp::new(1_700_000_000, 0).unwrap();
        let record = DiscountCode::unused(Code::new_unchecked("ABC1234"), created_at);

        let proto: v1::DiscountCode = record.into();
        assert_eq!(proto.code, "ABC1234");
        assert!(!proto.used);
        assert_eq!(proto.used_at, None);
        assert_eq!(proto.created_at.unwrap().seconds, 1_700_000_000);
    }

    #[test]
    fn page_converts_into_list_response() {
        let created_at = Timestamp::new(1_700_000_000, 0).unwrap();
        let used = DiscountCode {
            code: Code::new_unchecked("USED7777"),
            created_at,
            used: true,
            used_at: Some(created_at),
        };
        let query = PageQuery::new(2, 1, None);
        let page = Page::new(&query, vec![used], 3);

        let response: v1::ListCodesResponse = page.into();
        assert_eq!(response.page, 2);
        assert_eq!(response.page_size, 1);
        assert_eq!(response.total, 3);
        assert_eq!(response.items.len(), 1);
        assert!(response.items[0].used_at.is_some());
    }
}
