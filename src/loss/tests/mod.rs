//! Reference verification and gradient checking for the focal loss operators
