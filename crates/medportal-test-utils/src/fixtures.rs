// JSON payloads shaped like the backend's responses.

use serde_json::{json, Value};

/// Identity object as nested under `user` in an authentication response.
pub fn user(id: u64, email: &str, role: &str) -> Value {
    json!({
        "id": id,
        "first_name": "Jane",
        "last_name": "Doe",
        "email": email,
        "phone": "+15550100",
        "role": role,
        "is_active": true,
        "is_verified": true,
    })
}

/// `POST /jwt/auth` response with a nested user.
pub fn login_response(token: &str, email: &str, role: &str) -> Value {
    json!({
        "token": token,
        "user": user(1, email, role),
    })
}

/// `POST /jwt/register` response: flat fields, `accessToken`, no role.
pub fn register_response(token: &str, email: &str) -> Value {
    json!({
        "accessToken": token,
        "id": 42,
        "first_name": "J",
        "last_name": "D",
        "email": email,
        "phone": "+1",
        "country": null,
    })
}

pub fn patient_profile() -> Value {
    json!({
        "id": 10,
        "date_of_birth": "1990-04-12",
        "gender": "female",
        "blood_type": "O+",
    })
}

pub fn doctor_profile() -> Value {
    json!({
        "data": {
            "id": 20,
            "specialty": "cardiology",
            "license_number": "MD-2211",
        }
    })
}

pub fn laboratory_profile() -> Value {
    json!({
        "id": 30,
        "name": "Central Lab",
        "license_number": "LAB-77",
    })
}

pub fn medical_records() -> Value {
    json!([
        {"id": 1, "title": "Annual checkup", "date": "2024-01-10"},
        {"id": 2, "title": "Blood panel", "record_type": "lab_result", "date": "2024-02-02"},
    ])
}
