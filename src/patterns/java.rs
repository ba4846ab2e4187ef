/// Built-in Java signatures.
pub const DOCUMENT: &str = r##"
[SQL_INJECTION]
description: JDBC statements built by string concatenation
patterns:
- executeQuery\s*\(\s*.*\+.*\)
- executeUpdate\s*\(\s*.*\+.*\)
- \.execute\s*\(\s*".*"\s*\+
- createQuery\s*\(\s*.*\+.*\)

[COMMAND_INJECTION]
description: Process creation from variable input
patterns:
- Runtime\.getRuntime\(\)\.exec\s*\(
- new\s+ProcessBuilder\s*\(

[INSECURE_DESERIALIZATION]
description: Java native deserialization
patterns:
- new\s+ObjectInputStream\s*\(
- \.readObject\s*\(\s*\)
- XMLDecoder\s*\(

[PATH_TRAVERSAL]
description: File handles built from request parameters
patterns:
- new\s+File\s*\(\s*.*getParameter\s*\(
- Paths\.get\s*\(\s*.*getParameter\s*\(

[XSS]
description: Request parameters written to the response
patterns:
- getWriter\(\)\.(print|println|write)\s*\(\s*.*getParameter\s*\(

[SENSITIVE_DATA_EXPOSURE]
description: Weak hashing or hard-coded secrets
patterns:
- MessageDigest\.getInstance\s*\(\s*"(MD5|SHA-?1)"
- (password|passwd|secret)\s*=\s*"[^"]+"
"##;
