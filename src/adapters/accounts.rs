pub mod accounts_verifier;
