// Core module - Connection lifecycle supervision
pub mod bridge;
