//! Presentation-independent core of the EEG2BIDS wizard: the mode state
//! machine, the shared task record and the backend channel.

pub mod session;
