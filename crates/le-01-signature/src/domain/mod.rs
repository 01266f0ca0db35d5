pub mod errors;
pub mod secp256k1;
