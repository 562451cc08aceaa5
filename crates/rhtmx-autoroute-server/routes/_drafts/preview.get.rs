// Ignored by discovery: the leading underscore hides this directory.
