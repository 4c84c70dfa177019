//! Ready-made catalog data for tests.

use crate::InMemoryBookingStore;
use chrono::{DateTime, Duration, Utc};
use temple_booking_core::catalog::{GeoPoint, Temple};
use temple_booking_core::form::{FieldKind, FieldSchema, FormSchema};
use temple_booking_core::order::{ServiceId, UserId};

/// Slug of the temple seeded by [`seed_wat_arun`].
pub const WAT_ARUN: &str = "wat-arun";

/// A temple with no reviews.
#[must_use]
pub fn temple(slug: &str, name: &str) -> Temple {
    Temple {
        slug: slug.to_string(),
        name: name.to_string(),
        thumbnails: vec![format!("https://images.example/{slug}.jpg")],
        information: String::new(),
        address: "กรุงเทพมหานคร".to_string(),
        location: GeoPoint::new(13.7437, 100.4888),
        phone: Some("02-000-0000".to_string()),
        rating: 0.0,
        review_count: 0,
        open_time: "06:00".to_string(),
        close_time: "18:00".to_string(),
    }
}

/// The car-blessing form: a required plate number, a colour, offerings, and a consent box.
///
/// # Panics
///
/// Never: the keys are unique.
#[must_use]
#[allow(clippy::expect_used)]
pub fn car_form() -> FormSchema {
    FormSchema::new(vec![
        FieldSchema::new("plate", "ทะเบียนรถ", FieldKind::Input)
            .required()
            .with_helper("เช่น กข 1234"),
        FieldSchema::new(
            "color",
            "สีรถ",
            FieldKind::SelectOne {
                options: vec!["ขาว".to_string(), "ดำ".to_string(), "แดง".to_string()],
            },
        ),
        FieldSchema::new(
            "offerings",
            "ของถวาย",
            FieldKind::SelectMultiple {
                options: vec!["ดอกไม้".to_string(), "ธูป".to_string(), "เทียน".to_string()],
            },
        ),
        FieldSchema::new("note", "หมายเหตุ", FieldKind::Textarea),
        FieldSchema::new("consent", "ยินยอม", FieldKind::Checkbox).with_helper("ยอมรับเงื่อนไขการจอง"),
    ])
    .expect("fixture form keys are unique")
}

/// Seed Wat Arun with `car` and `home` services; returns the car service id.
pub fn seed_wat_arun(store: &InMemoryBookingStore) -> ServiceId {
    store.add_temple(temple(WAT_ARUN, "วัดอรุณราชวราราม"));
    let car = store.add_service(WAT_ARUN, "car", car_form());
    store.add_service(WAT_ARUN, "home", FormSchema::default());
    car
}

/// Register a user with a session valid for a day; returns the user id.
pub fn sign_in(store: &InMemoryBookingStore, user: &str, token: &str) -> UserId {
    let id = UserId::new(user);
    store.add_user(&id, Some(user), None);
    store.add_session(token, &id, far_future());
    id
}

fn far_future() -> DateTime<Utc> {
    Utc::now() + Duration::days(1)
}
