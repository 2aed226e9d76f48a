mod crud;
mod framing;
