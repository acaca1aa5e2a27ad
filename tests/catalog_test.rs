mod common;

use common::{book, new_listing, world};
use rust_decimal_macros::dec;
use staybook::domain::authorization::Actor;
use staybook::domain::listing::ListingUpdate;
use staybook::domain::money::Money;
use staybook::domain::review::{NewReview, ReviewUpdate};
use staybook::error::BookingError;

fn review(listing: staybook::domain::ids::ListingId, rating: u8) -> NewReview {
    NewReview {
        id: None,
        listing,
        rating,
        comment: "Great stay".to_string(),
    }
}

#[tokio::test]
async fn test_listing_summary_aggregates_reviews() {
    let w = world().await;
    let listings = w.engine.listings();
    let reviews = w.engine.reviews();

    let fresh = listings.get_listing(w.listing.id).await.unwrap();
    assert_eq!(fresh.review_count, 0);
    assert_eq!(fresh.average_rating, 0.0);

    reviews.create_review(&w.guest, review(w.listing.id, 5)).await.unwrap();
    reviews.create_review(&w.stranger, review(w.listing.id, 4)).await.unwrap();

    let rated = listings.get_listing(w.listing.id).await.unwrap();
    assert_eq!(rated.review_count, 2);
    assert_eq!(rated.average_rating, 4.5);

    let json = serde_json::to_value(&rated).unwrap();
    assert_eq!(json["title"], "Test Beach House");
    assert_eq!(json["price_per_night"], "1000.00");
    assert_eq!(json["review_count"], 2);
}

#[tokio::test]
async fn test_second_review_by_same_reviewer_conflicts() {
    let w = world().await;
    let reviews = w.engine.reviews();

    reviews.create_review(&w.guest, review(w.listing.id, 3)).await.unwrap();
    let again = reviews.create_review(&w.guest, review(w.listing.id, 5)).await;
    assert!(matches!(again, Err(BookingError::Conflict(_))));
    assert_eq!(reviews.list_reviews().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_rating_bounds_and_authorship() {
    let w = world().await;
    let reviews = w.engine.reviews();

    for rating in [0, 6] {
        assert!(matches!(
            reviews.create_review(&w.guest, review(w.listing.id, rating)).await,
            Err(BookingError::Validation(_))
        ));
    }
    assert!(matches!(
        reviews.create_review(&Actor::System, review(w.listing.id, 4)).await,
        Err(BookingError::Permission(_))
    ));

    let mine = reviews.create_review(&w.guest, review(w.listing.id, 4)).await.unwrap();
    let edit = ReviewUpdate {
        rating: Some(2),
        comment: Some("Noisy at night".to_string()),
    };
    assert!(matches!(
        reviews.update_review(&w.host, mine.id, edit.clone()).await,
        Err(BookingError::Permission(_))
    ));
    let edited = reviews.update_review(&w.guest, mine.id, edit).await.unwrap();
    assert_eq!(edited.rating, 2);

    assert!(matches!(
        reviews.delete_review(&w.stranger, mine.id).await,
        Err(BookingError::Permission(_))
    ));
    reviews.delete_review(&w.guest, mine.id).await.unwrap();
    assert!(matches!(
        reviews.get_review(mine.id).await,
        Err(BookingError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_only_host_edits_listing() {
    let w = world().await;
    let listings = w.engine.listings();
    let update = ListingUpdate {
        price_per_night: Some(Money::new(dec!(1250)).unwrap()),
        is_available: Some(false),
        ..Default::default()
    };

    let denied = listings.update_listing(&w.guest, w.listing.id, update.clone()).await;
    assert!(matches!(denied, Err(BookingError::Permission(msg)) if msg.contains("your own listings")));

    let updated = listings.update_listing(&w.host, w.listing.id, update).await.unwrap();
    assert_eq!(updated.price_per_night.to_string(), "1250.00");
    assert!(listings.available_listings().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_my_listings_and_available() {
    let w = world().await;
    let listings = w.engine.listings();

    let other = listings
        .create_listing(&w.stranger, new_listing("Mountain Lodge", "300"))
        .await
        .unwrap();
    listings
        .update_listing(
            &w.stranger,
            other.id,
            ListingUpdate {
                is_available: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let mine = listings.my_listings(&w.host).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].listing.id, w.listing.id);

    let open = listings.available_listings().await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].listing.id, w.listing.id);

    assert_eq!(listings.list_listings().await.unwrap().len(), 2);
    assert!(matches!(
        listings.my_listings(&Actor::System).await,
        Err(BookingError::Permission(_))
    ));
}

#[tokio::test]
async fn test_listing_delete_cascades() {
    let w = world().await;
    let receipt = book(&w).await;
    let written = w
        .engine
        .reviews()
        .create_review(&w.guest, review(w.listing.id, 5))
        .await
        .unwrap();

    let denied = w.engine.listings().delete_listing(&w.guest, w.listing.id).await;
    assert!(matches!(denied, Err(BookingError::Permission(_))));

    w.engine
        .listings()
        .delete_listing(&w.host, w.listing.id)
        .await
        .unwrap();

    assert!(matches!(
        w.engine.listings().get_listing(w.listing.id).await,
        Err(BookingError::NotFound { entity: "Listing", .. })
    ));
    assert!(matches!(
        w.engine.bookings().get_booking(&w.guest, receipt.booking.id).await,
        Err(BookingError::NotFound { entity: "Booking", .. })
    ));
    assert!(matches!(
        w.engine.reviews().get_review(written.id).await,
        Err(BookingError::NotFound { .. })
    ));
    assert!(w.engine.payments().list_payments(&w.guest).await.unwrap().is_empty());
    assert!(matches!(
        w.engine.listings().listing_reviews(w.listing.id).await,
        Err(BookingError::NotFound { .. })
    ));
}
