//! Resolution of duplicate pairs: which record stays primary, and how the
//! other's provenance is kept.

use crate::models::Listing;

/// Outcome of [`merge_duplicate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The candidate took the existing record's place.
    Replaced,
    /// The existing record stayed primary.
    Retained,
}

/// Number of populated descriptive fields, plus one for a coordinate.
/// Residential counts are ignored for land.
pub fn richness(listing: &Listing) -> usize {
    let mut score = [
        listing.price.is_some(),
        listing.area_m2.is_some(),
        listing.has_link(),
        listing.address.is_some(),
    ]
    .into_iter()
    .filter(|present| *present)
    .count();

    if listing.property_type.is_residential() {
        score += [&listing.bedrooms, &listing.bathrooms, &listing.parking]
            .into_iter()
            .filter(|v| v.is_some())
            .count();
    }
    if listing.geocoordinate.is_some() {
        score += 1;
    }
    score
}

/// Whether `candidate` should replace `existing` as the primary record.
pub fn candidate_wins(candidate: &Listing, existing: &Listing) -> bool {
    let (c, e) = (richness(candidate), richness(existing));
    if c != e {
        return c > e;
    }
    candidate.has_link() && !existing.has_link()
}

/// Merge `candidate` into `existing`, which is updated in place.
pub fn merge_duplicate(existing: &mut Listing, candidate: Listing) -> MergeOutcome {
    if candidate_wins(&candidate, existing) {
        let previous = std::mem::replace(existing, candidate);
        existing.add_secondary_source(&previous.source);
        for source in &previous.secondary_sources {
            existing.add_secondary_source(source);
        }
        MergeOutcome::Replaced
    } else {
        existing.add_secondary_source(&candidate.source);
        for source in &candidate.secondary_sources {
            existing.add_secondary_source(source);
        }
        MergeOutcome::Retained
    }
}
