mod otp;
mod password;
mod session;
mod token;

pub use self::{
    otp::{OTP_TTL_MINUTES, generate_otp, otp_expiry, otp_valid},
    password::{hash_password, verify_password},
    session::{AuthUser, Session},
    token::{Keys, USER_TOKEN, removal_cookie, session_cookie},
};
