//! User-facing (Thai) messages.
//!
//! These strings are part of the externally observable contract: clients match
//! on them and display them verbatim.

/// Error key used for the appointment date.
pub const DATE_KEY: &str = "date";

/// Error key used for the appointment time.
pub const TIME_KEY: &str = "time";

/// Date was left blank.
pub const SELECT_DATE: &str = "กรุณาเลือกวันที่";

/// Time was left blank.
pub const SELECT_TIME: &str = "กรุณาเลือกเวลา";

/// Date could not be parsed.
pub const INVALID_DATE: &str = "วันที่ไม่ถูกต้อง";

/// Date lies before today.
pub const PAST_DATE: &str = "ไม่สามารถจองย้อนหลังได้";

/// Time is not one of the bookable slots.
pub const INVALID_TIME: &str = "เวลาไม่ถูกต้อง";

/// Booking attempted without a session.
pub const LOGIN_REQUIRED: &str = "กรุณาเข้าสู่ระบบก่อนทำการจอง";

/// Review attempted without a session.
pub const LOGIN_REQUIRED_REVIEW: &str = "กรุณาเข้าสู่ระบบก่อนเขียนรีวิว";

/// Order insert failed.
pub const ORDER_SAVE_FAILED: &str = "ไม่สามารถบันทึกคำจองได้ กรุณาลองใหม่อีกครั้ง";

/// Order write outlived the request; the order may or may not exist.
pub const ORDER_WRITE_UNCONFIRMED: &str = "ระบบยังไม่ยืนยันการบันทึกคำจอง กรุณาตรวจสอบรายการจองก่อนลองใหม่อีกครั้ง";

/// Review write failed.
pub const REVIEW_SAVE_FAILED: &str = "เกิดข้อผิดพลาดในการบันทึกรีวิว กรุณาลองใหม่อีกครั้ง";

/// Rating outside 1-5.
pub const RATING_OUT_OF_RANGE: &str = "กรุณาให้คะแนน 1-5 ดาว";

/// Review comment longer than the allowed length.
pub const COMMENT_TOO_LONG: &str = "ความคิดเห็นต้องไม่เกิน 500 ตัวอักษร";

/// Booking form has at least one invalid field.
pub const FORM_INCOMPLETE: &str = "กรุณากรอกข้อมูลให้ครบถ้วน";

/// Request body is not valid JSON of the expected shape.
pub const INVALID_BODY: &str = "รูปแบบข้อมูลไม่ถูกต้อง";

/// Profile name left empty.
pub const NAME_REQUIRED: &str = "กรุณากรอกชื่อ";

/// Profile name longer than the allowed length.
pub const NAME_TOO_LONG: &str = "ชื่อต้องไม่เกิน 100 ตัวอักษร";

/// Phone number with the wrong characters or length.
pub const PHONE_INVALID: &str = "เบอร์โทรศัพท์ไม่ถูกต้อง";

/// Address longer than the allowed length.
pub const ADDRESS_TOO_LONG: &str = "ที่อยู่ต้องไม่เกิน 500 ตัวอักษร";

/// Birth date unparseable or in the future.
pub const BIRTH_DATE_INVALID: &str = "วันเกิดไม่ถูกต้อง";

/// Profile update has at least one invalid field.
pub const PROFILE_INVALID: &str = "ข้อมูลโปรไฟล์ไม่ถูกต้อง";

/// Profile write failed.
pub const PROFILE_SAVE_FAILED: &str = "ไม่สามารถบันทึกข้อมูลผู้ใช้ได้ กรุณาลองใหม่อีกครั้ง";

/// Generic failure.
pub const GENERIC_ERROR: &str = "เกิดข้อผิดพลาด กรุณาลองใหม่อีกครั้ง";

/// Required field left empty.
#[must_use]
pub fn fill_in(label: &str) -> String {
    format!("กรุณากรอก{label}")
}

/// Field value has the wrong shape or is not one of the offered options.
#[must_use]
pub fn invalid_value(label: &str) -> String {
    format!("ข้อมูล{label}ไม่ถูกต้อง")
}

/// Placeholder for free-text inputs without helper text.
#[must_use]
pub fn input_placeholder(label: &str) -> String {
    format!("กรอก{label}")
}

/// Placeholder option for single-choice selects.
#[must_use]
pub fn select_placeholder(label: &str) -> String {
    format!("เลือก{label}")
}

/// Thai display name of a service type used in booking views.
///
/// Unknown service types fall back to the raw identifier.
#[must_use]
pub fn service_display_name(service_type: &str) -> &str {
    match service_type {
        "car" => "พิธีอธิษฐานรถยนต์",
        "home" => "พิธีอธิษฐานบ้าน",
        "birth" => "พิธีขึ้นบ้านใหม่",
        "company" => "พิธีอธิษฐานบริษัท",
        "wedding" => "พิธีแต่งงาน",
        other => other,
    }
}

/// Thai display name of a service type used in catalog listings.
#[must_use]
pub fn service_listing_name(service_type: &str) -> &str {
    match service_type {
        "car" => "บริการเจิมรถ",
        "home" => "ทำบุญขึ้นบ้านใหม่",
        "birth" => "พิธีขึ้นชื่อ",
        "company" => "เปิดบริษัท/ร้านค้า",
        "wedding" => "พิธีแต่งงาน",
        other => other,
    }
}
