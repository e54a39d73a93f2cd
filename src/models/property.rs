use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub name: String,
    pub total_bookings: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub owner_id: String,
    pub address: String,
    pub bedrooms: i64,
    pub bathrooms: i64,
    /// Created by the agent from conversational context with default
    /// room counts, pending owner confirmation.
    pub is_placeholder: bool,
}
