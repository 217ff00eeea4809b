//! Filtered views over the shipment store
use std::collections::BTreeMap;

use super::shipment::Shipment;
use super::workflow::Track;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShipmentFilter {
    track: Option<Track>,
    status: Option<String>,
    search_text: Option<String>,
}

impl ShipmentFilter {
    /// Matches every shipment.
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_track(mut self, track: Track) -> Self {
        self.track = Some(track);
        self
    }
    pub fn set_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }
    pub fn set_search_text(mut self, text: impl Into<String>) -> Self {
        let text: String = text.into();
        // blank search is no search
        self.search_text = Some(text.trim().to_lowercase()).filter(|t| !t.is_empty());
        self
    }

    pub fn matches(&self, shipment: &Shipment) -> bool {
        if self.track.is_some_and(|track| track != shipment.track()) {
            return false;
        }
        if self.status.as_ref().is_some_and(|status| *status != shipment.status) {
            return false;
        }
        match &self.search_text {
            Some(needle) => searchable_fields(shipment).any(|field| field.to_lowercase().contains(needle.as_str())),
            None => true,
        }
    }
}

fn searchable_fields(shipment: &Shipment) -> impl Iterator<Item = &str> {
    [
        Some(shipment.id.as_str()),
        Some(shipment.goods.as_str()),
        Some(shipment.counterpart.name()),
        Some(shipment.counterpart.location()),
        shipment.enquiry.as_ref().map(|enquiry| enquiry.product.as_str()),
    ]
    .into_iter()
    .flatten()
}

/// Number of shipments per status, e.g. for dashboard tiles.
pub fn status_summary<'a>(shipments: impl IntoIterator<Item = &'a Shipment>) -> BTreeMap<String, usize> {
    let mut summary = BTreeMap::new();
    for shipment in shipments {
        *summary.entry(shipment.status.clone()).or_insert(0) += 1;
    }
    summary
}
