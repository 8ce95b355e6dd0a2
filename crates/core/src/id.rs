//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(Uuid);

        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in
            /// tests for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

uuid_id!(
    /// Identifier of a product (master data owned elsewhere).
    ProductId,
    "ProductId"
);
uuid_id!(
    /// Identifier of a warehouse location.
    LocationId,
    "LocationId"
);
uuid_id!(
    /// Identifier of an external party (supplier or customer).
    PartyId,
    "PartyId"
);
uuid_id!(
    /// Identifier of a ledger movement.
    MovementId,
    "MovementId"
);
uuid_id!(
    /// Identifier of a stock projection row.
    StockId,
    "StockId"
);
uuid_id!(
    /// Identifier of a stock transfer.
    TransferId,
    "TransferId"
);
uuid_id!(
    /// Identifier of an inventory adjustment.
    AdjustmentId,
    "AdjustmentId"
);
uuid_id!(
    /// Identifier of a purchase order.
    PurchaseOrderId,
    "PurchaseOrderId"
);
uuid_id!(
    /// Identifier of a purchase receipt.
    ReceiptId,
    "ReceiptId"
);
uuid_id!(
    /// Identifier of a sale.
    SaleId,
    "SaleId"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_round_trip() {
        let id = ProductId::new();
        let parsed: ProductId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<LocationId>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(_)));
    }
}
